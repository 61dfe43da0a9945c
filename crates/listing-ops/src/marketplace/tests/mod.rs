mod bulk;
mod common;
