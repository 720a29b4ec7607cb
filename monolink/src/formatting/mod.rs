//! Terminal output helpers.
//!
//! Colors come from `owo-colors`, tables from `comfy-table` and spinners
//! from `indicatif`.

mod output;
mod progress;
mod tables;

pub use output::{
    format_duration, print_key_value, print_section_header, print_success, print_summary_box,
    print_warning, Status,
};
pub use progress::create_spinner;
pub use tables::{print_job_table, print_status_table};
