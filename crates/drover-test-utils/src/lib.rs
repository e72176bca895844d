mod harness;

pub use harness::TestContext;
