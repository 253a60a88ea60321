//! Server-rendered HTML for the listing page.

use std::fmt::Write;

use stacks_http::flash::Notification;

use super::models::{book, Availability};
use crate::utils::escape_html;

/// Render the `home` page: pending notifications followed by every book.
pub fn book_list(books: &[book::Model], notifications: &[Notification]) -> String {
    let mut page = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Library</title>\n</head>\n<body>\n<h1>Library</h1>\n",
    );

    if !notifications.is_empty() {
        page.push_str("<ul class=\"messages\">\n");
        for notification in notifications {
            let _ = writeln!(
                page,
                "<li class=\"{}\">{}</li>",
                notification.level.as_str(),
                escape_html(&notification.text)
            );
        }
        page.push_str("</ul>\n");
    }

    if books.is_empty() {
        page.push_str("<p>No books in the catalog.</p>\n");
    } else {
        page.push_str(
            "<table>\n<thead><tr><th>Title</th><th>Author</th><th>Genre</th>\
             <th>Published</th><th>Status</th><th></th></tr></thead>\n<tbody>\n",
        );
        for book in books {
            book_row(&mut page, book);
        }
        page.push_str("</tbody>\n</table>\n");
    }

    page.push_str("</body>\n</html>\n");
    page
}

fn book_row(page: &mut String, book: &book::Model) {
    let availability = book.availability();
    let (action, label) = match availability {
        Availability::Available => ("borrow", "Borrow"),
        Availability::Borrowed => ("return", "Return"),
    };

    let _ = writeln!(
        page,
        "<tr id=\"book-{id}\"><td>{title}</td><td>{author}</td><td>{genre}</td>\
         <td>{published}</td><td>{status}</td><td><form method=\"post\" \
         action=\"/books/{id}/{action}\"><button type=\"submit\">{label}</button>\
         </form></td></tr>",
        id = book.id,
        title = escape_html(&book.title),
        author = escape_html(&book.author),
        genre = escape_html(&book.genre),
        published = book.published.format("%Y-%m-%d"),
        status = availability.label(),
    );
}
