mod buffer_pool_test;
mod iterator_test;
