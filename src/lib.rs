pub mod clock;
pub mod config;
pub mod connection;
pub mod controller;
pub mod drive;
pub mod gate;
pub mod input;
pub mod ip;
pub mod messages;
pub mod repeater;
pub mod runtime;
pub mod sequence;
pub mod transport;
