//! CleanJoy checkout engine.
//!
//! Drives a booking through a linear checkout: details, address, shipping
//! method, payment method, payment details and thank-you. The request layer
//! hands each request to [`CheckoutFlow::handle`] and renders or follows the
//! returned [`Transition`].
//!
//! # Modules
//!
//! - [`flow`] - Entry point: sessions, per-session locking, address-book upkeep
//! - [`sequencer`] - Guards, step dispatch and error-to-redirect mapping
//! - [`guard`] - Named step preconditions
//! - [`steps`] - One handler per checkout step
//! - [`resolver`] - Address-book entries and entered fields to shipping addresses
//! - [`payment`] - Card charges and payment bookkeeping
//! - [`services`] - Collaborator traits, in-memory and Stripe implementations
//! - [`session_store`] - Checkout session storage
//! - [`registry`] - Bookable services and their forms
//! - [`events`] - Checkout lifecycle events
//! - [`config`] - Environment configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod events;
pub mod flow;
pub mod guard;
pub mod models;
pub mod payment;
pub mod registry;
pub mod resolver;
pub mod sequencer;
pub mod services;
pub mod session_store;
pub mod steps;

pub use config::{CheckoutConfig, ConfigError, StripeConfig};
pub use error::{CheckoutError, FieldErrors, Result, StoreError};
pub use flow::{CheckoutFlow, CheckoutFlowBuilder, CheckoutRequest};
pub use models::{Message, Step, StepView, Transition};
pub use sequencer::StepSequencer;
pub use steps::{Action, StepInput};
