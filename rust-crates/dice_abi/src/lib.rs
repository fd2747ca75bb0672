//! ABI schema and value codec for the dice contract.

pub mod bet;
pub mod codec;
pub mod schema;

pub use bet::{
    BetDirection,
    RawBetRecord,
    decode_bets,
};
pub use codec::{
    AbiValue,
    DecodeError,
    EncodeError,
    Primitive,
};
pub use schema::{
    SchemaError,
    TypeSchema,
};

#[cfg(feature = "test-helpers")]
pub mod test_helpers;
