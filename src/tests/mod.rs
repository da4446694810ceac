// End-to-end cases for the fleet, driven over real sockets.

mod support;
