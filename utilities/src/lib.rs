pub mod telnet;
