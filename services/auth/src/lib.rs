//! Identity library: roles, password hashing, bearer tokens and login throttling

pub mod error;
pub mod jwt;
pub mod models;
pub mod rate_limiter;
pub mod repositories;
pub mod service;
pub mod validation;

pub use error::{AuthError, AuthResult};
pub use jwt::{Claims, JwtConfig, JwtService};
pub use models::{Capability, LoginCredentials, NewUser, Role, User, UserResponse};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use repositories::UserRepository;
pub use service::{AuthService, IssuedToken};
