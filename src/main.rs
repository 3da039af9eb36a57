use std::sync::Arc;

use anyhow::Context;
use blogverse_client::{
    auth::SignIn, reactions::ReactionKind, ApiClient, ApiResponse, AuthStore, CommentThread,
    Connections, FileSessionStore, PostFeed, Session, Settings,
};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "blogverse", about = "Read and write the BlogVerse social feed")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the feed, up to the given page.
    Feed {
        #[arg(default_value = "1")]
        page: u32,
    },
    /// Show one post.
    Post { id: Uuid },
    /// React to a post with like, love, haha, wow, sad or angry.
    React { post: Uuid, kind: ReactionKind },
    /// List a post's comments.
    Comments { post: Uuid },
    /// Comment on a post.
    Comment {
        post: Uuid,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Follow a user.
    Follow { user: Uuid },
    /// Sign in and store the session.
    SignIn { email: String, password: String },
    /// Forget the stored session.
    SignOut,
    /// Show the signed-in user.
    Me,
}

fn print<T: Serialize>(response: ApiResponse<T>) -> anyhow::Result<()> {
    let data = response.into_result()?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let settings = Settings::new();

    let session = match &settings.session_file {
        Some(path) => Session::new(Box::new(FileSessionStore::new(path))),
        None => Session::in_memory(),
    };
    let client = ApiClient::new(&settings, Arc::new(session))?;
    let auth = AuthStore::new(client.clone());
    let feed = PostFeed::new(client.clone(), settings.page_size);

    info!("using API at {}", client.base_url());

    match cli.command {
        Command::Feed { page } => {
            feed.refresh(Default::default()).await.into_result()?;
            while feed.cursor().page < page && feed.has_more() {
                feed.load_more().await.into_result()?;
            }
            println!("{}", serde_json::to_string_pretty(&feed.posts())?);
        }
        Command::Post { id } => print(feed.fetch_post(id).await)?,
        Command::React { post, kind } => {
            feed.fetch_post(post).await.into_result()?;
            feed.react(post, kind).await.into_result()?;
            print(ApiResponse::success(feed.post(post)))?;
        }
        Command::Comments { post } => {
            let thread = CommentThread::new(client.clone(), post, 0, settings.page_size);
            thread.load().await.into_result()?;
            println!("{}", serde_json::to_string_pretty(&thread.comments())?);
        }
        Command::Comment { post, text } => {
            if auth.current_user().is_none() && auth.is_authenticated() {
                // Lets the server echo a bare author name and still show a full record.
                auth.me().await.into_result()?;
            }
            let thread = CommentThread::new(client.clone(), post, 0, settings.page_size);
            print(thread.add_comment(text.join(" ")).await)?;
        }
        Command::Follow { user } => {
            let profile = auth
                .profile(user)
                .await
                .into_result()
                .with_context(|| format!("looking up user {}", user))?;
            let me = auth.me().await.into_result()?;
            let connections = Connections::new(client.clone(), me.id, settings.page_size);
            print(connections.follow(user, profile.is_private).await)?;
        }
        Command::SignIn { email, password } => {
            print(auth.sign_in(SignIn { email, password }).await)?;
        }
        Command::SignOut => {
            auth.sign_out();
            println!("signed out");
        }
        Command::Me => print(auth.me().await)?,
    }

    Ok(())
}
