pub mod analytics;
pub mod audit;
pub mod checkins;
pub mod clients;
pub mod contacts;
pub mod goals;
pub mod intake;
pub mod inventory;
pub mod outreach;
pub mod pages;
pub mod users;
