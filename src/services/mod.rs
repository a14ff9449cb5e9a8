pub mod decay_sweeper;
