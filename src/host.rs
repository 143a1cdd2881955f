//! Conversions between the column vectors of the host runtime and fields.
//!
//! Parameters travel from host to data source: [`for_each_parameter_set`] turns a
//! [`DataFrame`] into one parameter set per row, [`parameter_set_from_row`] converts a single row
//! of values. Result sets travel the other way: [`materialize`] fetches a result set into a
//! [`DataFrame`].

mod frame_builder;
mod parameters;
mod vector;

pub use self::{
    frame_builder::materialize,
    parameters::{field_from_value, for_each_parameter_set, host_type, parameter_set_from_row},
    vector::{DataFrame, HostType, HostVector},
};
