pub mod auth;
pub mod cars;
pub mod extract;
pub mod organizations;
pub mod rides;
pub mod users;
