use anyhow::Context;
use devconnect_api::{
    Claims, CommentId, EducationId, EducationInput, Error as ApiError, ExperienceId,
    ExperienceInput, PostId, PostInput, ProfileInput, TokenKeys, UserId, DEFAULT_TOKEN_TTL,
};

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long, default_value = "http://127.0.0.1:5000")]
    host: String,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Sign a bearer token with JWT_SECRET, for use as TOKEN
    MintToken {
        #[structopt(long)]
        user: Option<UserId>,

        #[structopt(long)]
        name: Option<String>,

        #[structopt(long)]
        avatar: Option<String>,

        /// Validity, in seconds
        #[structopt(long)]
        ttl: Option<i64>,
    },

    /// List all posts, oldest first
    List,

    Get {
        post: PostId,
    },

    /// Create a post as the bearer of TOKEN
    Create {
        text: String,

        #[structopt(long)]
        name: Option<String>,

        #[structopt(long)]
        avatar: Option<String>,
    },

    Delete {
        post: PostId,
    },

    Like {
        post: PostId,
    },

    Unlike {
        post: PostId,
    },

    Comment {
        post: PostId,
        text: String,
    },

    Uncomment {
        post: PostId,
        comment: CommentId,
    },

    /// Manage developer profiles
    Profile(ProfileCommand),
}

#[derive(structopt::StructOpt)]
enum ProfileCommand {
    /// Show the profile of the bearer of TOKEN
    Show,

    /// List all profiles
    All,

    Handle {
        handle: String,
    },

    User {
        user: UserId,
    },

    /// Create or update the profile of the bearer of TOKEN
    Save {
        #[structopt(long)]
        handle: Option<String>,

        #[structopt(long)]
        status: Option<String>,

        /// Comma-separated
        #[structopt(long)]
        skills: Option<String>,

        #[structopt(long)]
        company: Option<String>,

        #[structopt(long)]
        website: Option<String>,

        #[structopt(long)]
        location: Option<String>,

        #[structopt(long)]
        bio: Option<String>,

        #[structopt(long)]
        githubusername: Option<String>,
    },

    /// Delete the profile of the bearer of TOKEN
    Delete,

    AddExperience {
        title: String,
        company: String,

        /// RFC 3339 or YYYY-MM-DD
        from: String,

        #[structopt(long)]
        to: Option<String>,

        #[structopt(long)]
        current: bool,

        #[structopt(long)]
        location: Option<String>,

        #[structopt(long)]
        description: Option<String>,
    },

    RemoveExperience {
        entry: ExperienceId,
    },

    AddEducation {
        school: String,
        degree: String,
        fieldofstudy: String,

        /// RFC 3339 or YYYY-MM-DD
        from: String,

        #[structopt(long)]
        to: Option<String>,

        #[structopt(long)]
        current: bool,

        #[structopt(long)]
        description: Option<String>,
    },

    RemoveEducation {
        entry: EducationId,
    },
}

fn user_token() -> anyhow::Result<String> {
    std::env::var("TOKEN").context("retrieving TOKEN environment variable")
}

fn mint_token(
    user: Option<UserId>,
    name: Option<String>,
    avatar: Option<String>,
    ttl: i64,
) -> anyhow::Result<String> {
    let secret =
        std::env::var("JWT_SECRET").context("retrieving JWT_SECRET environment variable")?;
    let mut claims = Claims::new(user.unwrap_or_else(UserId::random), ttl);
    claims.name = name;
    claims.avatar = avatar;
    TokenKeys::from_secret(secret.as_bytes()).issue(&claims)
}

async fn send(req: reqwest::RequestBuilder) -> anyhow::Result<serde_json::Value> {
    let resp = req.send().await.context("sending request")?;
    let status = resp.status();
    let body = resp.bytes().await.context("reading response body")?;
    if !status.is_success() {
        let err = ApiError::parse(&body)
            .with_context(|| format!("server answered {status} with unknown body {body:?}"))?;
        return Err(err).with_context(|| format!("server answered {status}"));
    }
    serde_json::from_slice(&body).context("parsing response body as json")
}

fn profile_request(
    client: &reqwest::Client,
    host: &str,
    cmd: ProfileCommand,
) -> anyhow::Result<reqwest::RequestBuilder> {
    let api = format!("{}/api/profile", host.trim_end_matches('/'));
    Ok(match cmd {
        ProfileCommand::Show => client.get(&api).bearer_auth(user_token()?),
        ProfileCommand::All => client.get(format!("{api}/all")),
        ProfileCommand::Handle { handle } => client.get(format!("{api}/handle/{handle}")),
        ProfileCommand::User { user } => client.get(format!("{api}/user/{user}")),
        ProfileCommand::Save {
            handle,
            status,
            skills,
            company,
            website,
            location,
            bio,
            githubusername,
        } => {
            let input = ProfileInput {
                handle,
                status,
                skills: skills.map(|s| s.split(',').map(|s| String::from(s.trim())).collect()),
                company,
                website,
                location,
                bio,
                githubusername,
                ..ProfileInput::default()
            };
            client.post(&api).bearer_auth(user_token()?).json(&input)
        }
        ProfileCommand::Delete => client.delete(&api).bearer_auth(user_token()?),
        ProfileCommand::AddExperience {
            title,
            company,
            from,
            to,
            current,
            location,
            description,
        } => {
            let input = ExperienceInput {
                title: Some(title),
                company: Some(company),
                location,
                from: Some(from),
                to,
                current,
                description,
            };
            client
                .post(format!("{api}/experience"))
                .bearer_auth(user_token()?)
                .json(&input)
        }
        ProfileCommand::RemoveExperience { entry } => client
            .delete(format!("{api}/experience/{entry}"))
            .bearer_auth(user_token()?),
        ProfileCommand::AddEducation {
            school,
            degree,
            fieldofstudy,
            from,
            to,
            current,
            description,
        } => {
            let input = EducationInput {
                school: Some(school),
                degree: Some(degree),
                fieldofstudy: Some(fieldofstudy),
                from: Some(from),
                to,
                current,
                description,
            };
            client
                .post(format!("{api}/education"))
                .bearer_auth(user_token()?)
                .json(&input)
        }
        ProfileCommand::RemoveEducation { entry } => client
            .delete(format!("{api}/education/{entry}"))
            .bearer_auth(user_token()?),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = <Opt as structopt::StructOpt>::from_args();

    let client = reqwest::Client::new();
    let api = format!("{}/api/posts", opt.host.trim_end_matches('/'));

    let req = match opt.cmd {
        Command::Profile(cmd) => profile_request(&client, &opt.host, cmd)?,
        Command::MintToken {
            user,
            name,
            avatar,
            ttl,
        } => {
            let ttl = ttl.unwrap_or(DEFAULT_TOKEN_TTL);
            println!("{}", mint_token(user, name, avatar, ttl)?);
            return Ok(());
        }
        Command::List => client.get(&api),
        Command::Get { post } => client.get(format!("{api}/{post}")),
        Command::Create { text, name, avatar } => {
            let mut input = PostInput::new(text);
            input.name = name;
            input.avatar = avatar;
            client.post(&api).bearer_auth(user_token()?).json(&input)
        }
        Command::Delete { post } => client
            .delete(format!("{api}/{post}"))
            .bearer_auth(user_token()?),
        Command::Like { post } => client
            .post(format!("{api}/like/{post}"))
            .bearer_auth(user_token()?),
        Command::Unlike { post } => client
            .post(format!("{api}/dislike/{post}"))
            .bearer_auth(user_token()?),
        Command::Comment { post, text } => client
            .post(format!("{api}/comment/{post}"))
            .bearer_auth(user_token()?)
            .json(&PostInput::new(text)),
        Command::Uncomment { post, comment } => client
            .delete(format!("{api}/comment/{post}/{comment}"))
            .bearer_auth(user_token()?),
    };

    let res = send(req).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&res).context("pretty-printing response")?
    );

    Ok(())
}
