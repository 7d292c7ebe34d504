use argh::FromArgs;

#[derive(FromArgs)]
#[argh(description = "Interactive FTP client, based on ferryftp")]
pub struct Args {
    #[argh(switch, short = 'D', description = "enable TRACE log level")]
    pub debug: bool,
    #[argh(switch, short = 'v', description = "verbose mode")]
    pub verbose: bool,
    #[argh(switch, short = 'V', description = "print version")]
    pub version: bool,
    #[argh(
        option,
        description = "HTTP proxy for the control connection ([http://][user:password@]host:port); defaults to FTP_PROXY"
    )]
    pub proxy: Option<String>,
    #[argh(switch, description = "use active mode (PORT) for data connections")]
    pub active: bool,
    #[argh(
        option,
        default = "30",
        description = "timeout of each operation, in seconds (default: 30)"
    )]
    pub timeout: u64,
    #[argh(positional, description = "host to connect to (host[:port])")]
    pub host: Option<String>,
}
