mod http;
mod utils;
