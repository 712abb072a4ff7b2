//! Data models for presence, calendar, devices and colors

pub mod calendar;
pub mod color;
pub mod device;
pub mod presence;

pub use calendar::{next_upcoming, BusyStatus, CalendarEvent};
pub use color::{zone_colors, Rgb};
pub use device::{Capability, Device, DeviceAssignment};
pub use presence::{Availability, PresenceSnapshot};
