//! Launch MPI executables under different launcher flavours and run shipped callables
//! inside an MPI job.

pub mod config;
pub mod distributed;
pub mod envelope;
pub mod launcher;
