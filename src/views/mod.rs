pub mod admins;
pub mod pages;
pub mod redirects;
