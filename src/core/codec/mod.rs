pub mod codec_util;
