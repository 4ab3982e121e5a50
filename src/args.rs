use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "文件整理服务的命令行客户端", long_about = None)]
pub struct Cli {
    /// 服务端地址，覆盖配置文件中的 server_url
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// 打印时间戳并输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(about = "重置配置文件")]
    Config,
    #[command(about = "显示源目录、输出目录与索引统计")]
    Stats,
    #[command(about = "通过服务端选择源目录")]
    ChooseSource,
    #[command(about = "通过服务端选择输出目录")]
    ChooseOutput,
    #[command(about = "在服务端打开输出目录")]
    OpenOutput,
    #[command(about = "扫描源目录并跟踪进度")]
    Scan,
    #[command(about = "上传文件到输出目录")]
    Upload {
        /// 要上传的文件
        #[arg(value_name = "FILE")]
        files: Vec<PathBuf>,
    },
}

pub fn get_cli_args() -> Cli {
    Cli::parse()
}
