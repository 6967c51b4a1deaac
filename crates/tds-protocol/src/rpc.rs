//! RPC (Remote Procedure Call) request encoding.
//!
//! RPC is used for calling stored procedures and `sp_executesql` for
//! parameterized queries. This module produces the request payload; packet
//! framing is left to the transport.
//!
//! ## Wire Format
//!
//! ```text
//! RPC Request:
//! +-------------------+
//! | ALL_HEADERS       | (transaction descriptor header)
//! +-------------------+
//! | ProcName/ProcID   | (procedure identifier)
//! +-------------------+
//! | Option Flags      | (2 bytes)
//! +-------------------+
//! | Parameters        | (repeated, see `encode_parameter`)
//! +-------------------+
//! ```

use bitflags::bitflags;
use bytes::Bytes;
use tds_types::TypeError;

use crate::codec::{declare_parameters, encode_parameter};
use crate::data_type::DataTypeRegistry;
use crate::param::Parameter;
use crate::writer::ByteWriter;

/// Name length value announcing a well-known procedure id.
const PROC_ID_SWITCH: u16 = 0xFFFF;

/// ALL_HEADERS header type of the transaction descriptor header.
const TRANSACTION_DESCRIPTOR_HEADER: u16 = 0x0002;

/// Well-known stored procedure IDs.
///
/// These are special procedure IDs that SQL Server recognizes
/// without requiring the procedure name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ProcId {
    /// sp_cursor (0x0001)
    Cursor = 0x0001,
    /// sp_cursoropen (0x0002)
    CursorOpen = 0x0002,
    /// sp_cursorprepare (0x0003)
    CursorPrepare = 0x0003,
    /// sp_cursorexecute (0x0004)
    CursorExecute = 0x0004,
    /// sp_cursorprepexec (0x0005)
    CursorPrepExec = 0x0005,
    /// sp_cursorunprepare (0x0006)
    CursorUnprepare = 0x0006,
    /// sp_cursorfetch (0x0007)
    CursorFetch = 0x0007,
    /// sp_cursoroption (0x0008)
    CursorOption = 0x0008,
    /// sp_cursorclose (0x0009)
    CursorClose = 0x0009,
    /// sp_executesql (0x000A) - Primary method for parameterized queries
    ExecuteSql = 0x000A,
    /// sp_prepare (0x000B)
    Prepare = 0x000B,
    /// sp_execute (0x000C)
    Execute = 0x000C,
    /// sp_prepexec (0x000D) - Prepare and execute in one call
    PrepExec = 0x000D,
    /// sp_prepexecrpc (0x000E)
    PrepExecRpc = 0x000E,
    /// sp_unprepare (0x000F)
    Unprepare = 0x000F,
}

bitflags! {
    /// RPC option flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RpcOptions: u16 {
        /// Recompile the procedure.
        const WITH_RECOMPILE = 0x0001;
        /// No metadata in response.
        const NO_METADATA = 0x0002;
        /// Reuse metadata from previous call.
        const REUSE_METADATA = 0x0004;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Procedure {
    Name(String),
    Id(ProcId),
}

/// RPC request builder.
#[derive(Debug, Clone)]
pub struct RpcRequest {
    procedure: Procedure,
    options: RpcOptions,
    params: Vec<Parameter>,
}

impl RpcRequest {
    /// Create a new RPC request for a named procedure.
    pub fn named(proc_name: impl Into<String>) -> Self {
        Self {
            procedure: Procedure::Name(proc_name.into()),
            options: RpcOptions::empty(),
            params: Vec::new(),
        }
    }

    /// Create a new RPC request for a well-known procedure.
    #[must_use]
    pub fn by_id(proc_id: ProcId) -> Self {
        Self {
            procedure: Procedure::Id(proc_id),
            options: RpcOptions::empty(),
            params: Vec::new(),
        }
    }

    /// Create an sp_executesql request.
    ///
    /// The statement and the declaration of `params` are sent as the two
    /// leading positional NVARCHAR parameters.
    ///
    /// # Example
    ///
    /// ```
    /// use tds_protocol::param::Parameter;
    /// use tds_protocol::rpc::RpcRequest;
    ///
    /// let rpc = RpcRequest::execute_sql(
    ///     "SELECT * FROM users WHERE id = @p1 AND name = @p2",
    ///     vec![
    ///         Parameter::typed("@p1", "Int", 42)?,
    ///         Parameter::typed("@p2", "NVarChar", "Alice")?,
    ///     ],
    /// )?;
    /// let payload = rpc.encode()?;
    /// # assert!(!payload.is_empty());
    /// # Ok::<(), tds_types::TypeError>(())
    /// ```
    pub fn execute_sql(sql: &str, params: Vec<Parameter>) -> Result<Self, TypeError> {
        let mut request = Self::by_id(ProcId::ExecuteSql);

        request.params.push(nvarchar("", sql)?);
        if !params.is_empty() {
            request
                .params
                .push(nvarchar("", &declare_parameters(&params))?);
        }
        request.params.extend(params);

        Ok(request)
    }

    /// Create an sp_prepare request.
    pub fn prepare(sql: &str, params: &[Parameter]) -> Result<Self, TypeError> {
        let mut request = Self::by_id(ProcId::Prepare);

        let int = int_type()?;
        request
            .params
            .push(Parameter::builder("@handle", int).output().build()?);
        request
            .params
            .push(nvarchar("@params", &declare_parameters(params))?);
        request.params.push(nvarchar("@stmt", sql)?);
        // 1 = WITH RECOMPILE
        request.params.push(Parameter::typed("@options", "Int", 1)?);

        Ok(request)
    }

    /// Create an sp_execute request.
    pub fn execute(handle: i32, params: Vec<Parameter>) -> Result<Self, TypeError> {
        let mut request = Self::by_id(ProcId::Execute);
        request
            .params
            .push(Parameter::typed("@handle", "Int", handle)?);
        request.params.extend(params);
        Ok(request)
    }

    /// Create an sp_unprepare request.
    pub fn unprepare(handle: i32) -> Result<Self, TypeError> {
        let mut request = Self::by_id(ProcId::Unprepare);
        request
            .params
            .push(Parameter::typed("@handle", "Int", handle)?);
        Ok(request)
    }

    /// Set option flags.
    #[must_use]
    pub fn with_options(mut self, options: RpcOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a parameter.
    #[must_use]
    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// Parameters in the order they are sent.
    #[must_use]
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Well-known procedure id, if the request uses one.
    #[must_use]
    pub fn proc_id(&self) -> Option<ProcId> {
        match self.procedure {
            Procedure::Id(id) => Some(id),
            Procedure::Name(_) => None,
        }
    }

    /// Encode the RPC request to bytes (auto-commit mode).
    ///
    /// For requests within an explicit transaction, use [`Self::encode_with_transaction`].
    pub fn encode(&self) -> Result<Bytes, TypeError> {
        self.encode_with_transaction(0)
    }

    /// Encode the RPC request with a transaction descriptor.
    ///
    /// `transaction_descriptor` is the value the server returned in the
    /// BEGIN_TXN environment change, or 0 in auto-commit mode.
    pub fn encode_with_transaction(&self, transaction_descriptor: u64) -> Result<Bytes, TypeError> {
        let mut dst = ByteWriter::with_capacity(256);

        // ALL_HEADERS: total length (4), then one transaction descriptor
        // header: length (4) + type (2) + descriptor (8) + outstanding requests (4)
        dst.write_u32_le(4 + 18);
        dst.write_u32_le(18);
        dst.write_u16_le(TRANSACTION_DESCRIPTOR_HEADER);
        dst.write_u64_le(transaction_descriptor);
        dst.write_u32_le(1);

        match &self.procedure {
            Procedure::Id(proc_id) => {
                dst.write_u16_le(PROC_ID_SWITCH);
                dst.write_u16_le(*proc_id as u16);
            }
            Procedure::Name(name) => dst.write_us_varchar(name),
        }

        dst.write_u16_le(self.options.bits());

        for param in &self.params {
            encode_parameter(param, &mut dst)?;
        }

        Ok(dst.freeze())
    }
}

fn int_type() -> Result<crate::data_type::DataTypeRef, TypeError> {
    DataTypeRegistry::standard()
        .by_name("Int")
        .ok_or_else(|| TypeError::UnsupportedConversion {
            from: "Int".to_string(),
            to: "registered data type",
        })
}

fn nvarchar(name: &str, value: &str) -> Result<Parameter, TypeError> {
    Parameter::typed(name, "NVarChar", value)
}
