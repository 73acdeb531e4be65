pub mod pdb;
pub mod remark;
pub mod report;
pub mod tlsout;
pub mod traits;
