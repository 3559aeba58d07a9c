pub mod cut;
pub mod heal;
pub mod projection;
