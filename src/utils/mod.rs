pub mod mime_decoder;
