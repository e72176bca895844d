pub mod pipe {
    pub const MANIFEST: &str = "PIPE.json";
    pub const LOCK: &str = "PIPE.lock";
    pub const KILL: &str = "PIPE.kill";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const NEWS_FEED: &str = "news_feed.csv";
    pub const HISTORY: &str = "PIPE_history.txt";
    pub const TMP: &str = "tmp";
}

pub mod ext {
    pub const PAYLOAD: &str = "json";
    pub const LOG: &str = "log";
    pub const RUNNING: &str = "running";
    pub const FINISHED: &str = "finished";
    pub const FAILED: &str = "failed";
    pub const EXIT: &str = "exit";
    pub const KILL: &str = "kill";
    pub const OQSUB: &str = "oqsub";
    pub const EQSUB: &str = "eqsub";
    pub const SCRIPT: &str = "sh";
}

pub mod events {
    pub const SUBMITTED: &str = "submitted";
    pub const RUNNING: &str = "running";
    pub const FINISHED: &str = "finished";
    pub const FAILED: &str = "failed";
}

pub mod placeholders {
    pub const OMITTED: &str = "gb_niak_omitted";
}

/// Field separator of `news_feed.csv` lines.
pub const NEWS_FEED_SEP: &str = " , ";

/// `qsub -N` rejects names longer than this on SGE.
pub const QSUB_NAME_MAX: usize = 15;
