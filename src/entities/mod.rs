pub mod car;
pub mod join_ride_request;
pub mod organization;
pub mod organization_member;
pub mod ride;
pub mod ride_feedback;
pub mod ride_passenger;
pub mod user;
pub mod user_feedback;
