pub mod audit;
pub mod cli;
pub mod cutter;
pub mod fetcher;
pub mod io;
pub mod logging;
pub mod manifest;
pub mod outside;
pub mod processor;
pub mod runner;
pub mod tabular;
pub mod timecode;
pub mod trimmer;
