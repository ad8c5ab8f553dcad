mod compile;
mod helpers;
