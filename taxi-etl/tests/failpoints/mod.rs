mod publish_test;
