pub mod password;
pub mod token;

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginResult, NewAccount};
pub use auth_service_impl::SeaOrmAuthService;

pub mod admin_service;
pub mod admin_service_impl;
pub use admin_service::{AdminService, AdminUserUpdate};
pub use admin_service_impl::SeaOrmAdminService;

pub mod scheduler;
pub use scheduler::Scheduler;
