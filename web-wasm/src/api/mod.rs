//! 解析サーバとの通信

mod xhr;

pub use xhr::XhrApi;

use postdisaster_common::DEFAULT_API_URL;

/// 接続先URL（ビルド時の `POSTDISASTER_API_URL` で上書き可能）
pub fn api_base_url() -> &'static str {
    option_env!("POSTDISASTER_API_URL").unwrap_or(DEFAULT_API_URL)
}
