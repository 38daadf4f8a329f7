pub mod nearby;
pub mod presence;
pub mod requests;
pub mod technicians;
