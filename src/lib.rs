#[allow(non_snake_case)]
pub mod Voltammetry;
pub mod cli;
