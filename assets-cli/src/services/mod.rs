// Business logic services layer
//
// Pure calculations that sit on top of the API client and the bulk update
// operations, usable from any command.

pub mod buyout;
