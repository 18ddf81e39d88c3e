//! promsel: label-matcher injection for PromQL-style metric queries.
//!
//! Inserts and merges label matchers into query expressions without touching
//! template-variable placeholders, and normalizes backend label/tag payloads
//! into flat record lists.

pub mod config;
pub mod error;
pub mod filters;
pub mod matcher;
pub mod query;
pub mod request;
pub mod response;
pub mod selector;
pub mod template;

pub use config::Config;
pub use error::{Error, Result};
pub use filters::{apply_adhoc_filters, AdhocFilter};
pub use matcher::{regex_escape, LabelMatcher, LabelValue, MatchOp, Quote};
pub use query::{add_label_to_query, tokenize, Token, TokenKind};
pub use request::{apply_template_variables, QueryModel, QueryTarget, TimeRange};
pub use response::{
    decode_list_payload, decode_list_response, decode_response_json, DataFrame, Field,
    FieldValues, LabelRecord, ListVariant, QueryResponse, Record, TagRecord, ValueVector,
};
pub use selector::{merge_label, SelectorBody};
pub use template::{find_variable, TemplateVariables, VariableRef, VariableValue};
