//! # tds-protocol
//!
//! Client-side codec for the MS-TDS (Tabular Data Stream) token stream used by
//! Microsoft SQL Server.
//!
//! The crate decodes the tokens a server sends in response to a request
//! (column metadata, rows, completion and informational messages, environment
//! changes, login acknowledgment, return values) and encodes typed RPC
//! parameters. Values are decoded into [`tds_types::SqlValue`] through a
//! registry of per-type codecs.
//!
//! ## Design Philosophy
//!
//! This crate is intentionally IO-agnostic. It contains no networking logic and
//! makes no assumptions about the async runtime. Bytes are handed to a
//! [`TokenStreamParser`] as they arrive; a token split across chunks is
//! retried once more bytes are fed, so the decoded sequence never depends on
//! where the chunk boundaries fall. The `tds-codec` crate drives the parser
//! from an async byte stream.
//!
//! ## Example
//!
//! ```rust
//! use tds_protocol::{ParserConfig, Token, TokenStreamParser};
//!
//! let mut parser = TokenStreamParser::new(ParserConfig::default());
//!
//! // DONE, final, no row count
//! parser.feed(&[0xFD, 0x00, 0x00, 0xC1, 0x00]);
//! parser.feed(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
//!
//! let token = parser.next_token()?;
//! assert!(matches!(token, Some(Token::Done(_))));
//! assert!(parser.next_token()?.is_none());
//! parser.finish()?;
//! # Ok::<(), tds_protocol::ProtocolError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod collation;
pub mod cursor;
pub mod data_type;
pub mod error;
pub mod metadata;
pub mod param;
pub mod parser;
pub mod rpc;
pub mod token;
pub mod types;
pub mod version;
pub mod writer;

pub use codec::{declare_parameters, decode_value, encode_parameter};
pub use collation::{COLLATION_SIZE, Collation};
pub use cursor::ByteCursor;
pub use data_type::{DataType, DataTypeRef, DataTypeRegistry, LengthField};
pub use error::ProtocolError;
pub use metadata::{ColumnMetadata, TypeInfo};
pub use param::{ParamStatus, Parameter, ParameterBuilder};
pub use parser::{ParserConfig, ParserState, TokenStreamParser, Tokens};
pub use rpc::{ProcId, RpcOptions, RpcRequest};
pub use token::{
    ColMetadata, DecodeContext, Done, DoneStatus, EnvChange, EnvChangeType, EnvChangeValue,
    FeatureAck, FeatureExtAck, FedAuthInfo, LoginAck, Order, ReturnValue, ReturnValueStatus, Row,
    ServerMessage, SessionState, SspiToken, TdsInterface, Token, TokenType,
};
pub use types::{ColumnFlags, TypeId, Updateable};
pub use version::TdsVersion;
pub use writer::ByteWriter;
