mod check_db;
mod create_user;
mod migrate;
mod purge;

pub use check_db::cmd_check_db;
pub use create_user::cmd_create_user;
pub use migrate::cmd_migrate;
pub use purge::cmd_purge;
