pub mod calendar;
pub mod cycle;
pub mod dose;
pub mod expense;
pub mod insight;
pub mod labs;
pub mod wellness;

pub use calendar::CalendarConnection;
pub use cycle::{Cycle, CycleStatus};
pub use dose::{Dose, DoseStatus};
