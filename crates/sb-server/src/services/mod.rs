pub mod recurring;
