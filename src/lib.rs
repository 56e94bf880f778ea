//! Staff-side alerts for pending medication order requests.
//!
//! Polls the pharmacy plugin's `admin-ajax.php` check, keeps a baseline of the
//! pending count and raises an audible and a visual alert once per increase.

#![warn(clippy::pedantic)]
#![warn(clippy::std_instead_of_core)]
#![warn(clippy::str_to_string)]
#![warn(clippy::unused_trait_names)]

pub mod ajax;
pub mod audio;
pub mod config;
pub mod control;
pub mod error;
pub mod notifier;
pub mod poller;
pub mod signals;
pub mod surface;
