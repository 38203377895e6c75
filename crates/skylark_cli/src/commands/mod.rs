pub mod login;
pub mod logout;
pub mod notifications;
pub mod post;
pub mod profile;
pub mod timeline;
pub mod whoami;
