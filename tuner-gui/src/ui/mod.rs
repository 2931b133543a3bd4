//! # UI Module
//!
//! This module contains all UI components for the guitar tuner window.

pub mod cent_meter;
pub mod main_display;
