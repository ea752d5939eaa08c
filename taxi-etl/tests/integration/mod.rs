mod dimension_test;
mod local_store_test;
mod publish_test;
