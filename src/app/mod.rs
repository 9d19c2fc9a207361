// Application layer: one pipeline per command line tool.

pub mod pipelines;
