pub mod pixeldiff;
