//! `argus-solvers` contains the data structures and move solvers for the fault
//! dispute games played by the argus challenge agent.

pub mod fault;
