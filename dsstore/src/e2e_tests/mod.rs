//! End-to-end tests at the store level.
//!
//! Each test file covers one scenario, writing through `Store`, closing, and
//! reading the file back with a fresh handle.

#![cfg(test)]

mod helpers;

mod test_create_empty;
mod test_find;
mod test_holds_data;
mod test_internal_split;
mod test_long_filenames;
mod test_random_order;
mod test_read_finder_layout;
mod test_sequential_insertion;
mod test_split_boundaries;
