mod integration {
    pub mod common;

    mod api_tests;
}
