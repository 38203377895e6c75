//! Skylark Core - session and timeline services for the Skylark client.
//!
//! This crate provides everything between the network and a front-end:
//! - Typed XRPC calls against a PDS (`api`)
//! - Sign-in and access token lifecycle (`auth`)
//! - Profile lookups and the current user (`profile`)
//! - Home timeline, notifications and posting (`timeline`, `notifications`, `post`)
//! - Display-ready views of feed items and notifications (`view`)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod notifications;
pub mod post;
pub mod profile;
pub mod session;
pub mod telemetry;
pub mod timeline;
pub mod view;

#[cfg(test)]
pub mod test_helpers;

pub use api::{ApiClient, ApiError, ApiResult, XrpcClient};
pub use auth::{Account, AuthenticationService, SignInOutcome};
pub use config::SkylarkConfig;
pub use error::{CoreError, Result};
pub use notifications::{NotificationPage, NotificationsService};
pub use post::PostService;
pub use profile::ProfileService;
pub use session::{Session, Skylark};
pub use telemetry::{NoopTelemetry, Telemetry, TracingTelemetry};
pub use timeline::{FeedPage, TimelineService};
pub use view::{FeedItemView, NotificationView};
